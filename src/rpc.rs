//! Native side of the script bridge.
//!
//! Pages talk to the native side with JSON strings:
//!
//! * `{"saucer:call": true, "name": .., "params": [..], "id": ..}` calls an exposed function. The
//!   reply is delivered by executing `window.saucer.internal.receive(..)` with
//!   `{"saucer:resolve": true, "id": .., "result": ..}` or `{.., "error": ..}`.
//! * `{"saucer:resolve": true, "id": .., "result": ..}` (or `"error"`) settles an evaluation the
//!   native side started with `Webview::evaluate`.
//!
//! Anything else is not ours and gets dropped.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::app::{Application, Launch};
use crate::errors::{AppError, RpcError};

/// How a call or evaluation ended: a result or the error payload.
pub(crate) type Outcome = Result<Value, Value>;

type Invoke = Arc<dyn Fn(Vec<Value>) -> Outcome + Send + Sync>;

// ---------- Exposed functions ----------

/// A native callable reachable from script. Implemented for `Fn(A, B, ..) -> Result<R, E>` with up
/// to six deserializable arguments.
pub trait Function<Args>: Send + Sync + 'static {
    fn invoke(&self, params: Vec<Value>) -> Outcome;
}

fn decode_param<T: DeserializeOwned>(index: usize, param: Option<Value>) -> Result<T, Value> {
    let param = param.unwrap_or(Value::Null);
    serde_json::from_value(param).map_err(|e| Value::String(format!("argument {index}: {e}")))
}

fn encode_result<R: Serialize>(result: R) -> Outcome {
    serde_json::to_value(result).map_err(|e| Value::String(format!("result could not be encoded: {e}")))
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_function {
    ($($ty:ident $var:ident),*) => {
        impl<Func, Out, Fail, $($ty,)*> Function<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Result<Out, Fail> + Send + Sync + 'static,
            Out: Serialize,
            Fail: fmt::Display,
            $($ty: DeserializeOwned,)*
        {
            #[allow(unused_mut, unused_variables, unused_assignments)]
            fn invoke(&self, params: Vec<Value>) -> Outcome {
                let arity = count!($($ty)*);
                if params.len() != arity {
                    return Err(Value::String(format!(
                        "expected {arity} argument(s), got {}",
                        params.len()
                    )));
                }

                let mut params = params.into_iter();
                let mut index = 0;
                $(
                    let $var: $ty = decode_param(index, params.next())?;
                    index += 1;
                )*

                match (self)($($var),*) {
                    Ok(result) => encode_result(result),
                    Err(error) => Err(Value::String(error.to_string())),
                }
            }
        }
    };
}

impl_function!();
impl_function!(A a);
impl_function!(A a, B b);
impl_function!(A a, B b, C c);
impl_function!(A a, B b, C c, D d);
impl_function!(A a, B b, C c, D d, E e);
impl_function!(A a, B b, C c, D d, E e, F f);

/// An exposed function and where it runs.
#[derive(Clone)]
pub(crate) struct Exposed {
    invoke: Invoke,
    pub launch: Launch,
}

impl Exposed {
    pub fn new<Args, F>(function: F, launch: Launch) -> Self
    where
        Args: 'static,
        F: Function<Args>,
    {
        Self {
            invoke: Arc::new(move |params: Vec<Value>| function.invoke(params)),
            launch,
        }
    }

    /// Call the function. A panic becomes a rejection.
    pub fn call(&self, params: Vec<Value>) -> Outcome {
        panic::catch_unwind(AssertUnwindSafe(|| (self.invoke)(params))).unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "exposed function panicked".to_string());
            Err(Value::String(reason))
        })
    }
}

// ---------- Argument literals ----------

/// Values spliced into an evaluated expression as JSON literals. Implemented for `()` and tuples
/// of up to six serializable values.
pub trait Arguments {
    fn literals(self) -> Result<Vec<String>, RpcError>;
}

macro_rules! impl_arguments {
    ($($ty:ident $var:ident),*) => {
        impl<$($ty: Serialize),*> Arguments for ($($ty,)*) {
            fn literals(self) -> Result<Vec<String>, RpcError> {
                let ($($var,)*) = self;
                Ok(vec![$(serde_json::to_string(&$var).map_err(RpcError::Encode)?),*])
            }
        }
    };
}

impl_arguments!();
impl_arguments!(A a);
impl_arguments!(A a, B b);
impl_arguments!(A a, B b, C c);
impl_arguments!(A a, B b, C c, D d);
impl_arguments!(A a, B b, C c, D d, E e);
impl_arguments!(A a, B b, C c, D d, E e, F f);

/// Replace each `{}` in `code` with the next literal. `{{` and `}}` produce literal braces; other
/// braces are copied as they are.
pub fn format(code: &str, literals: &[String]) -> Result<String, RpcError> {
    let mut out = String::with_capacity(code.len() + literals.iter().map(String::len).sum::<usize>());
    let mut chars = code.chars().peekable();
    let mut next = 0;

    while let Some(c) = chars.next() {
        let following = chars.peek().copied();
        match (c, following) {
            ('{', Some('{')) => {
                chars.next();
                out.push('{');
            }
            ('}', Some('}')) => {
                chars.next();
                out.push('}');
            }
            ('{', Some('}')) => {
                chars.next();
                let literal = literals.get(next).ok_or_else(|| {
                    RpcError::Format(format!("placeholder #{next} has no argument"))
                })?;
                out.push_str(literal);
                next += 1;
            }
            _ => out.push(c),
        }
    }

    if next < literals.len() {
        log::debug!("{} argument(s) not referenced by the expression", literals.len() - next);
    }

    Ok(out)
}

// ---------- Wire messages ----------

#[derive(Debug, Deserialize)]
pub(crate) struct Call {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Value>,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Resolve {
    pub id: u64,
    #[serde(default)]
    pub result: Value,
    /// `Some(Value::Null)` when the page rejected with `null`
    #[serde(default, deserialize_with = "present")]
    pub error: Option<Value>,
}

/// Keeps a present `null` apart from a missing field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Resolve {
    pub fn outcome(self) -> Outcome {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Inbound {
    Call(Call),
    Resolve(Resolve),
}

fn tagged(object: &serde_json::Map<String, Value>, tag: &str) -> bool {
    object.get(tag).and_then(Value::as_bool).unwrap_or(false)
}

/// Decode a page message. `None` for anything that is not a well-formed bridge message.
pub(crate) fn decode(message: &str) -> Option<Inbound> {
    let value: Value = serde_json::from_str(message).ok()?;
    let object = value.as_object()?;

    let inbound = if tagged(object, "saucer:call") {
        serde_json::from_value(value).map(Inbound::Call)
    } else if tagged(object, "saucer:resolve") {
        serde_json::from_value(value).map(Inbound::Resolve)
    } else {
        return None;
    };

    inbound.map_err(|e| log::debug!("malformed bridge message: {e}")).ok()
}

/// Script that delivers the outcome of call `id` to the page.
pub(crate) fn reply(id: u64, outcome: Outcome) -> String {
    let message = match outcome {
        Ok(result) => json!({ "saucer:resolve": true, "id": id, "result": result }),
        Err(error) => json!({ "saucer:resolve": true, "id": id, "error": error }),
    };
    format!("window.saucer.internal.receive({message});")
}

/// Script that evaluates `code` and reports the value back as evaluation `id`.
pub(crate) fn evaluation(id: u64, code: &str) -> String {
    format!("window.saucer.internal.resolve({id}, (async () => ({code}))());")
}

// ---------- Per-webview state ----------

#[derive(Default)]
pub(crate) struct Rpc {
    functions: HashMap<String, Exposed>,
    pending: HashMap<u64, oneshot::Sender<Outcome>>,
    next_id: u64,
}

impl Rpc {
    /// Register `exposed` under `name`. An existing function with that name stays.
    pub fn expose(&mut self, name: String, exposed: Exposed) -> bool {
        if self.functions.contains_key(&name) {
            log::warn!("function {name:?} is already exposed, keeping the first one");
            return false;
        }
        self.functions.insert(name, exposed);
        true
    }

    pub fn unexpose(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.functions.clear();
    }

    pub fn function(&self, name: &str) -> Option<Exposed> {
        self.functions.get(name).cloned()
    }

    pub fn exposed(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Open a pending evaluation and return its id.
    pub fn register(&mut self, tx: oneshot::Sender<Outcome>) -> u64 {
        self.next_id += 1;
        self.pending.insert(self.next_id, tx);
        self.next_id
    }

    /// Settle evaluation `id`. Unknown or already settled ids are ignored.
    pub fn settle(&mut self, id: u64, outcome: Outcome) -> bool {
        match self.pending.remove(&id) {
            Some(tx) => {
                // The receiver may be gone; the evaluation is settled either way
                let _ = tx.send(outcome);
                true
            }
            None => {
                log::debug!("resolve for unknown evaluation {id}, ignoring");
                false
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

// ---------- Evaluation future ----------

enum State {
    Failed(Option<RpcError>),
    Pending(oneshot::Receiver<Outcome>),
}

/// Result of `Webview::evaluate`. Resolves to the decoded value of the expression.
///
/// Await it, or block on it with [`wait`](Self::wait) from a thread that is not the UI thread.
/// There is no cancellation: dropping it only discards the value.
pub struct Evaluation<T> {
    state: State,
    app: Application,
    _result: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Evaluation<T> {
    pub(crate) fn pending(app: Application, rx: oneshot::Receiver<Outcome>) -> Self {
        Self {
            state: State::Pending(rx),
            app,
            _result: PhantomData,
        }
    }

    pub(crate) fn failed(app: Application, error: RpcError) -> Self {
        Self {
            state: State::Failed(Some(error)),
            app,
            _result: PhantomData,
        }
    }

    /// Block until the page answered. Refused on the UI thread, which has to deliver the answer.
    pub fn wait(self) -> Result<T, RpcError> {
        match self.state {
            State::Failed(error) => Err(error.unwrap_or(RpcError::Abandoned)),
            State::Pending(rx) => {
                if self.app.thread_safe() {
                    return Err(AppError::WouldDeadlock.into());
                }
                settle(rx.blocking_recv())
            }
        }
    }
}

impl<T: DeserializeOwned> Future for Evaluation<T> {
    type Output = Result<T, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Failed(error) => Poll::Ready(Err(error.take().unwrap_or(RpcError::Abandoned))),
            State::Pending(rx) => Pin::new(rx).poll(cx).map(settle),
        }
    }
}

fn settle<T: DeserializeOwned>(
    received: Result<Outcome, oneshot::error::RecvError>,
) -> Result<T, RpcError> {
    match received {
        Ok(Ok(value)) => serde_json::from_value(value).map_err(RpcError::Decode),
        Ok(Err(error)) => Err(RpcError::Rejected(error)),
        Err(_) => Err(RpcError::Abandoned),
    }
}
