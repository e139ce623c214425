//! Type-erased method invocation.
//!
//! Service methods are bound once, at class-definition time, to an
//! [`Invoker`]: a closure that downcasts the registered service instance and
//! calls the typed method with the bound [`Arguments`]. Nothing is looked up
//! by name at call time.

use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestId;
use crate::error::{InvocationError, ServiceResult};
use crate::identity::Identity;

/// A live service instance shared across concurrent invocations.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Boxed invocation future.
pub type InvokeFuture = Pin<Box<dyn Future<Output = ServiceResult<Value>> + Send>>;

type ErasedInvoker = Arc<dyn Fn(ServiceInstance, Arguments) -> InvokeFuture + Send + Sync>;

/// Arguments bound for one invocation, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Value>,
    identity: Option<Identity>,
    headers: HeaderMap,
    request_id: RequestId,
}

impl Arguments {
    /// Creates arguments from bound values.
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Attaches the authenticated identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Attaches the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Deserializes the argument at `index`.
    ///
    /// A missing position reads as `null`, so optional parameters can be
    /// taken as `Option<T>`.
    ///
    /// # Example
    ///
    /// ```
    /// use apiary_core::Arguments;
    /// use serde_json::json;
    ///
    /// let args = Arguments::new(vec![json!(7), json!(["a", "b"])]);
    /// let id: i64 = args.get(0).unwrap();
    /// let tags: Vec<String> = args.get(1).unwrap();
    /// let missing: Option<String> = args.get(2).unwrap();
    /// assert_eq!((id, tags.len(), missing), (7, 2, None));
    /// ```
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> ServiceResult<T> {
        let value = self.values.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            InvocationError::illegal_argument(format!("argument {index} has the wrong shape: {e}"))
        })
    }

    /// Raw bound value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All bound values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of bound values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The authenticated identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The inbound request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

/// A callable bound to one method declaration.
///
/// # Example
///
/// ```
/// use apiary_core::{Arguments, Invoker, ServiceInstance};
/// use std::sync::Arc;
///
/// struct Greeter;
///
/// impl Greeter {
///     fn greet(&self, name: &str) -> String {
///         format!("hello {name}")
///     }
/// }
///
/// let invoker = Invoker::new(|svc: Arc<Greeter>, args: Arguments| async move {
///     let name: String = args.get(0)?;
///     Ok(svc.greet(&name))
/// });
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// let instance: ServiceInstance = Arc::new(Greeter);
/// let out = rt
///     .block_on(invoker.invoke(instance, Arguments::new(vec!["bee".into()])))
///     .unwrap();
/// assert_eq!(out, "hello bee");
/// ```
#[derive(Clone)]
pub struct Invoker {
    inner: ErasedInvoker,
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker").finish_non_exhaustive()
    }
}

impl Invoker {
    /// Binds a typed async method of service `S`.
    ///
    /// The result is serialized to JSON; `()` becomes `null`.
    pub fn new<S, R, F, Fut>(method: F) -> Self
    where
        S: Send + Sync + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Arc<S>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult<R>> + Send + 'static,
    {
        let method = Arc::new(method);
        let inner: ErasedInvoker = Arc::new(move |instance: ServiceInstance, args: Arguments| {
            let method = Arc::clone(&method);
            Box::pin(async move {
                let service = instance.downcast::<S>().map_err(|_| {
                    InvocationError::Unexpected(anyhow::anyhow!(
                        "registered instance is not a {}",
                        std::any::type_name::<S>()
                    ))
                })?;
                let result = method(service, args).await?;
                serde_json::to_value(result).map_err(|e| InvocationError::Unexpected(e.into()))
            })
        });
        Self { inner }
    }

    /// Invokes the bound method on `instance`.
    pub fn invoke(&self, instance: ServiceInstance, args: Arguments) -> InvokeFuture {
        (self.inner)(instance, args)
    }
}
