use std::sync::Arc;

use anyhow::anyhow;
use once_cell::sync::OnceCell;

use super::frame::Frame;
use super::ir::{DynamicOp, LambdaNode, Node, RefTarget, UnitSource};
use super::scope::Scope;
use super::unit::CompiledUnit;
use crate::coerce::{CastMode, CoercionTable};
use crate::concat::ConcatSelector;
use crate::config::BackendConfig;
use crate::dispatch::{
    CallSite, CallSiteId, CallSiteTable, DispatchFlags, DispatchKind, LookupResolver, Resolver, Signature, adapt_args,
};
use crate::error::{Result, ScriptError, SiteLocation};
use crate::lambda::{
    BodyFn, Capture, CaptureMode, CapturedVariable, LambdaBody, LambdaDescriptor, LambdaSynthesizer, unknown_shape,
};
use crate::typ::ScriptType;
use crate::util::fast_map::{FastHashSet, fast_hash_set_new};
use crate::val::Val;
use crate::whitelist::Lookup;

/// Whitelisted list class that list initializers build.
pub const LIST_CLASS: &str = "ArrayList";
/// Whitelisted function creating an empty list with a capacity hint.
pub const LIST_CONSTRUCTOR: &str = "ArrayList.new";

const LIST_ADD: &str = "add";
const ITERATOR: &str = "iterator";
const HAS_NEXT: &str = "hasNext";
const NEXT: &str = "next";

/// Compiled operation: evaluates against the current frame.
pub(super) type Step = Box<dyn Fn(&mut Frame) -> Result<Val> + Send + Sync>;

/// Call sites of a unit, installed once compilation finishes. Steps hold the
/// arena and a site id, never the site itself.
pub(super) type SiteArena = Arc<OnceCell<CallSiteTable>>;

/// Compiles [`UnitSource`]s against one lookup and one backend configuration.
pub struct Writer {
    lookup: Arc<dyn Lookup>,
    resolver: Arc<dyn Resolver>,
    synthesizer: LambdaSynthesizer,
    selector: ConcatSelector,
    pic_depth: usize,
}

impl Writer {
    /// Writer over the process-wide configuration and join probe.
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        let config = BackendConfig::global();
        Self::with_config(lookup, config).with_selector(ConcatSelector::probed(config))
    }

    /// Writer taking every knob from `config`, the concatenation strategy
    /// included.
    pub fn with_config(lookup: Arc<dyn Lookup>, config: &BackendConfig) -> Self {
        Self {
            resolver: Arc::new(LookupResolver::new(lookup.clone())),
            synthesizer: LambdaSynthesizer::new(lookup.clone()),
            selector: ConcatSelector::from_config(config),
            pic_depth: config.dispatch.pic_depth,
            lookup,
        }
    }

    /// Replaces the resolution callback dynamic operations fall back to.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_selector(mut self, selector: ConcatSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_pic_depth(mut self, depth: usize) -> Self {
        self.pic_depth = depth;
        self
    }

    #[inline]
    pub fn selector(&self) -> &ConcatSelector {
        &self.selector
    }

    pub fn compile(&self, source: &UnitSource) -> Result<CompiledUnit> {
        let mut unit = UnitBuilder {
            writer: self,
            name: source.name.clone(),
            sites: CallSiteTable::new(),
            arena: Arc::new(OnceCell::new()),
            needs: fast_hash_set_new(),
            scopes: vec![Scope::new(&source.body)],
        };
        for (name, ty) in &source.params {
            unit.scope().declare(name, ty.clone(), true);
        }
        let body = unit.compile(&source.body)?;
        let UnitBuilder {
            sites,
            arena,
            needs,
            mut scopes,
            ..
        } = unit;
        let layout = scopes.pop().map(Scope::into_layout).unwrap_or_default();
        tracing::debug!(
            target: "scour::codegen",
            unit = %source.name,
            params = source.params.len(),
            slots = layout.len(),
            call_sites = sites.len(),
            "compiled unit"
        );
        if arena.set(sites).is_err() {
            return Err(ScriptError::Host(anyhow!("call sites of {} installed twice", source.name)));
        }
        Ok(CompiledUnit::new(
            source.name.clone(),
            source.params.clone(),
            needs,
            layout,
            body,
            arena,
            self.lookup.clone(),
        ))
    }
}

struct UnitBuilder<'w> {
    writer: &'w Writer,
    name: Arc<str>,
    sites: CallSiteTable,
    arena: SiteArena,
    needs: FastHashSet<Arc<str>>,
    scopes: Vec<Scope>,
}

impl UnitBuilder<'_> {
    fn scope(&mut self) -> &mut Scope {
        // compile() pushes the unit scope before anything else runs
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn current(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn location(&self, offset: u32) -> SiteLocation {
        SiteLocation::new(self.name.clone(), offset)
    }

    /// Resolves a variable read in the current frame, recording parameter use.
    fn read(&mut self, name: &Arc<str>, want_param: bool) -> Result<(usize, ScriptType)> {
        let Some(binding) = self.current().lookup(name).cloned() else {
            return Err(ScriptError::rejected(
                &self.location(0),
                "unknown variable",
                "a declared name in scope",
                name,
            ));
        };
        if want_param && !binding.param {
            return Err(ScriptError::rejected(&self.location(0), "not a unit parameter", "a parameter", name));
        }
        if binding.param {
            self.needs.insert(name.clone());
        }
        Ok((binding.slot, binding.ty))
    }

    fn compile(&mut self, node: &Node) -> Result<Step> {
        let step: Step = match node {
            Node::Const(val) => {
                let val = val.clone();
                Box::new(move |_: &mut Frame| Ok(val.clone()))
            }
            Node::Param(name) | Node::Local(name) => {
                let (slot, _) = self.read(name, matches!(node, Node::Param(_)))?;
                Box::new(move |frame: &mut Frame| Ok(frame.get(slot)))
            }
            Node::Let { name, ty, value } => {
                let value = self.compile(value)?;
                let slot = self.scope().declare(name, ty.clone(), false);
                self.store_step(slot, ty.clone(), value)?
            }
            Node::Store { name, value } => {
                let value = self.compile(value)?;
                let Some(binding) = self.current().lookup(name).cloned() else {
                    return Err(ScriptError::rejected(
                        &self.location(0),
                        "assignment to an undeclared variable",
                        "a declared name in scope",
                        name,
                    ));
                };
                self.store_step(binding.slot, binding.ty, value)?
            }
            Node::Seq(nodes) => {
                let steps = nodes.iter().map(|n| self.compile(n)).collect::<Result<Vec<_>>>()?;
                Box::new(move |frame: &mut Frame| {
                    let mut last = Val::Null;
                    for step in &steps {
                        last = step(frame)?;
                    }
                    Ok(last)
                })
            }
            Node::Cast { value, to, mode } => {
                let value = self.compile(value)?;
                self.convert_step(value, to.clone(), *mode)?
            }
            Node::Dynamic(op) => self.dynamic(op)?,
            Node::Concat { operands, offset } => {
                let types: Vec<ScriptType> = operands.iter().map(|n| self.static_type(n)).collect();
                let plan = self.writer.selector.plan(&self.location(*offset), &types)?;
                let steps = self.compile_all(operands)?;
                Box::new(move |frame: &mut Frame| {
                    let values = eval_all(&steps, frame)?;
                    plan.execute(&values)
                })
            }
            Node::Lambda(lambda) => self.lambda(lambda)?,
            Node::MethodRef { shape, target, offset } => self.method_ref(shape, target, *offset)?,
            Node::ForEach {
                name,
                ty,
                iterable,
                body,
                offset,
            } => self.for_each(name, ty, iterable, body, *offset)?,
            Node::ListInit { elements, offset } => self.list_init(elements, *offset)?,
        };
        Ok(step)
    }

    fn compile_all(&mut self, nodes: &[Node]) -> Result<Box<[Step]>> {
        nodes.iter().map(|n| self.compile(n)).collect()
    }

    fn store_step(&self, slot: usize, ty: ScriptType, value: Step) -> Result<Step> {
        let convert = self.convert_step(value, ty, CastMode::Implicit)?;
        Ok(Box::new(move |frame: &mut Frame| {
            let val = convert(frame)?;
            frame.set(slot, val.clone());
            Ok(val)
        }))
    }

    fn convert_step(&self, value: Step, to: ScriptType, mode: CastMode) -> Result<Step> {
        if to == ScriptType::Def {
            return Ok(value);
        }
        let table = CoercionTable::global()?;
        let lookup = self.writer.lookup.clone();
        Ok(Box::new(move |frame: &mut Frame| {
            let val = value(frame)?;
            table.coerce(&val, &to, mode, Some(lookup.as_ref()))
        }))
    }

    fn site(&mut self, kind: DispatchKind, name: Arc<str>, signature: Signature, flags: DispatchFlags, offset: u32) -> CallSiteId {
        let site = CallSite::new(
            self.location(offset),
            kind,
            name,
            signature,
            flags,
            self.writer.resolver.clone(),
            self.writer.pic_depth,
        );
        self.sites.push(site)
    }

    fn dynamic(&mut self, op: &DynamicOp) -> Result<Step> {
        let params: Vec<ScriptType> = op.args.iter().map(|n| self.static_type(n)).collect();
        let args = self.compile_all(&op.args)?;
        let id = self.site(op.kind, op.name.clone(), Signature::new(params, op.ret.clone()), op.flags, op.offset);
        let arena = self.arena.clone();
        Ok(Box::new(move |frame: &mut Frame| {
            let values = eval_all(&args, frame)?;
            installed(&arena, id)?.invoke(&values)
        }))
    }

    fn lambda(&mut self, lambda: &LambdaNode) -> Result<Step> {
        let location = self.location(lambda.offset);
        let mut sources = Vec::with_capacity(lambda.captures.len());
        for capture in &lambda.captures {
            let (slot, _) = self.read(&capture.name, false).map_err(|_| {
                ScriptError::rejected(&location, "captured variable is not in scope", "a declared name", &capture.name)
            })?;
            if capture.mode == CaptureMode::ByRef && !self.current().is_cell(slot) {
                return Err(ScriptError::rejected(
                    &location,
                    "variable captured by reference has no cell",
                    "a variable declared in the enclosing function",
                    &capture.name,
                ));
            }
            sources.push((slot, capture.mode));
        }

        let shape = self.writer.lookup.functional_shape(&lambda.shape);
        let mut scope = Scope::new(&lambda.body);
        for capture in &lambda.captures {
            scope.declare(&capture.name, capture.ty.clone(), false);
        }
        for (i, param) in lambda.params.iter().enumerate() {
            let ty = shape
                .as_ref()
                .and_then(|s| s.params().get(i).cloned())
                .unwrap_or(ScriptType::Def);
            scope.declare(param, ty, false);
        }
        self.scopes.push(scope);
        let body = self.compile(&lambda.body);
        let layout = self.scopes.pop().map(Scope::into_layout).unwrap_or_default();
        let body = body?;

        let arity = lambda.params.len();
        let body: BodyFn = Arc::new(move |captures: &[Capture], args: &[Val]| {
            let mut frame = layout.frame();
            for (slot, capture) in captures.iter().enumerate() {
                frame.bind(slot, capture);
            }
            for (i, arg) in args.iter().enumerate() {
                frame.set(captures.len() + i, arg.clone());
            }
            body(&mut frame)
        });
        let factory = self.writer.synthesizer.synthesize(LambdaDescriptor {
            shape: lambda.shape.clone(),
            captures: lambda.captures.clone(),
            body: LambdaBody::Compiled { arity, body },
            location,
        })?;
        Ok(Box::new(move |frame: &mut Frame| {
            let captures = sources
                .iter()
                .map(|&(slot, mode)| match mode {
                    CaptureMode::ByValue => Ok(Capture::Value(frame.get(slot))),
                    CaptureMode::ByRef => frame
                        .cell(slot)
                        .map(Capture::Cell)
                        .ok_or_else(|| ScriptError::Host(anyhow!("slot {slot} is not a cell"))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(factory.bind(captures)?.into_val())
        }))
    }

    fn method_ref(&mut self, shape: &Arc<str>, target: &RefTarget, offset: u32) -> Result<Step> {
        let location = self.location(offset);
        let lookup = self.writer.lookup.clone();
        let Some(functional) = lookup.functional_shape(shape) else {
            return Err(unknown_shape(&location, shape));
        };
        let arity = functional.arity();
        match target {
            RefTarget::Function(name) => {
                let Some(callee) = lookup.function(name, arity) else {
                    return Err(ScriptError::rejected(
                        &location,
                        "no permitted function for this reference",
                        format!("{name} taking {arity} argument(s)"),
                        name,
                    ));
                };
                // nothing to capture: one closure serves every evaluation
                let closure = self.writer.synthesizer.delegate(shape, callee, None, location)?.into_val();
                Ok(Box::new(move |_: &mut Frame| Ok(closure.clone())))
            }
            RefTarget::Bound {
                receiver,
                class,
                method,
            } => {
                let Some(callee) = lookup.method(class, method, arity) else {
                    return Err(ScriptError::rejected(
                        &location,
                        "no permitted method for this reference",
                        format!("{class}.{method} taking {arity} argument(s)"),
                        method,
                    ));
                };
                let receiver = self.compile(receiver)?;
                let factory = self.writer.synthesizer.synthesize(LambdaDescriptor {
                    shape: shape.clone(),
                    captures: vec![CapturedVariable::by_value("this", ScriptType::Def)],
                    body: LambdaBody::Delegate(callee),
                    location: location.clone(),
                })?;
                let method = method.clone();
                Ok(Box::new(move |frame: &mut Frame| {
                    let this = receiver(frame)?;
                    if this.is_null() {
                        return Err(ScriptError::Dispatch {
                            location: location.clone(),
                            name: method.clone(),
                            arg_types: "null".into(),
                            reason: "receiver is null".into(),
                        });
                    }
                    Ok(factory.bind(vec![Capture::Value(this)])?.into_val())
                }))
            }
        }
    }

    /// Iterates a dynamic value through its `iterator`, with one call site per
    /// protocol method. The loop variable is a fresh cell per element when a
    /// closure captures it by reference.
    fn for_each(&mut self, name: &Arc<str>, ty: &ScriptType, iterable: &Node, body: &Node, offset: u32) -> Result<Step> {
        let source_ty = self.static_type(iterable);
        let source = self.compile(iterable)?;
        let call = DispatchKind::MethodCall;
        let none = DispatchFlags::NONE;
        let iterator = self.site(call, Arc::from(ITERATOR), Signature::new(vec![source_ty], ScriptType::Def), none, offset);
        let has_next = self.site(call, Arc::from(HAS_NEXT), Signature::new(vec![ScriptType::Def], ScriptType::BOOL), none, offset);
        let next = self.site(call, Arc::from(NEXT), Signature::dynamic(1), none, offset);

        let slot = self.scope().declare(name, ty.clone(), false);
        let renew = self.current().is_cell(slot);
        let ty = ty.clone();
        let table = CoercionTable::global()?;
        let lookup = self.writer.lookup.clone();
        let body = self.compile(body)?;
        let arena = self.arena.clone();
        let location = self.location(offset);
        Ok(Box::new(move |frame: &mut Frame| {
            let iter = installed(&arena, iterator)?.invoke(&[source(frame)?])?;
            let iter = std::slice::from_ref(&iter);
            loop {
                match installed(&arena, has_next)?.invoke(iter)? {
                    Val::Bool(true) => {}
                    Val::Bool(false) => break,
                    other => {
                        return Err(ScriptError::Dispatch {
                            location: location.clone(),
                            name: Arc::from(HAS_NEXT),
                            arg_types: other.type_name().to_string(),
                            reason: "expected a boolean".into(),
                        });
                    }
                }
                let element = installed(&arena, next)?.invoke(iter)?;
                let element = match &ty {
                    ScriptType::Def => element,
                    ty => table.coerce(&element, ty, CastMode::Explicit, Some(lookup.as_ref()))?,
                };
                if renew {
                    frame.renew(slot);
                }
                frame.set(slot, element);
                body(frame)?;
            }
            Ok(Val::Null)
        }))
    }

    /// Builds the whitelisted list class sized for `elements` and adds each
    /// in order. Both host calls are resolved here, not at run time.
    fn list_init(&mut self, elements: &[Node], offset: u32) -> Result<Step> {
        let location = self.location(offset);
        let lookup = self.writer.lookup.clone();
        let Some(constructor) = lookup.function(LIST_CONSTRUCTOR, 1) else {
            return Err(ScriptError::rejected(
                &location,
                "no permitted list constructor",
                format!("{LIST_CONSTRUCTOR} taking 1 argument(s)"),
                LIST_CONSTRUCTOR,
            ));
        };
        let Some(add) = lookup.method(LIST_CLASS, LIST_ADD, 1) else {
            return Err(ScriptError::rejected(
                &location,
                "no permitted list add",
                format!("{LIST_CLASS}.{LIST_ADD} taking 1 argument(s)"),
                LIST_ADD,
            ));
        };
        let steps = self.compile_all(elements)?;
        let capacity = [Val::Int(i32::try_from(steps.len()).unwrap_or(i32::MAX))];
        Ok(Box::new(move |frame: &mut Frame| {
            let capacity = adapt_args(constructor.descriptor().params(), &capacity, Some(lookup.as_ref()))?;
            let list = constructor.invoke(&capacity)?;
            for step in steps.iter() {
                let args = [list.clone(), step(frame)?];
                add.invoke(&adapt_args(add.descriptor().params(), &args, Some(lookup.as_ref()))?)?;
            }
            Ok(list)
        }))
    }

    /// Static type the checker assigned to `node`, as far as the tree tells.
    fn static_type(&self, node: &Node) -> ScriptType {
        match node {
            Node::Const(val) => match val {
                Val::Null => ScriptType::Def,
                Val::Str(_) => ScriptType::Text,
                Val::Object(obj) => ScriptType::Object(obj.class().clone()),
                other => ScriptType::Primitive(other.tag()),
            },
            Node::Param(name) | Node::Local(name) | Node::Store { name, .. } => self
                .current()
                .lookup(name)
                .map(|b| b.ty.clone())
                .unwrap_or(ScriptType::Def),
            Node::Let { ty, .. } | Node::Cast { to: ty, .. } => ty.clone(),
            Node::Seq(nodes) => nodes.last().map_or(ScriptType::Void, |n| self.static_type(n)),
            Node::Dynamic(op) => op.ret.clone(),
            Node::Concat { .. } => ScriptType::Text,
            Node::Lambda(LambdaNode { shape, .. }) | Node::MethodRef { shape, .. } => ScriptType::Object(shape.clone()),
            Node::ForEach { .. } => ScriptType::Void,
            Node::ListInit { .. } => ScriptType::object(LIST_CLASS),
        }
    }
}

fn eval_all(steps: &[Step], frame: &mut Frame) -> Result<Vec<Val>> {
    steps.iter().map(|step| step(frame)).collect()
}

fn installed(arena: &OnceCell<CallSiteTable>, id: CallSiteId) -> Result<&CallSite> {
    arena
        .get()
        .and_then(|table| table.get(id))
        .ok_or_else(|| ScriptError::Host(anyhow!("call site {} is not installed", id.index())))
}
