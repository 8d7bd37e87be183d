//! Thread-local ambient execution context
//!
//! Constructors that are not handed a device read the innermost context for
//! their runtime on the current thread. Contexts are installed with RAII
//! guards, so every override is undone when its scope ends, including on
//! unwind. Nothing here is shared between threads: a new thread starts from
//! the runtime's default device in full precision.

use super::{Device, Runtime};
use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
    static NEXT_TOKEN: Cell<u64> = const { Cell::new(0) };
}

struct ContextEntry {
    token: u64,
    runtime: TypeId,
    context: Box<dyn Any>,
}

/// Ambient device and precision defaults for one runtime
#[derive(Clone, Debug)]
pub struct ExecutionContext<R: Runtime> {
    device: R::Device,
    reduced_precision: bool,
}

impl<R: Runtime> ExecutionContext<R> {
    /// Context placing tensors on `device` in full precision
    pub fn new(device: R::Device) -> Self {
        Self {
            device,
            reduced_precision: false,
        }
    }

    /// The innermost context installed on this thread, or the default
    pub fn current() -> Self {
        let runtime = TypeId::of::<R>();
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .rev()
                .filter(|entry| entry.runtime == runtime)
                .find_map(|entry| entry.context.downcast_ref::<Self>().cloned())
                .unwrap_or_default()
        })
    }

    /// Replace the device
    pub fn with_device(mut self, device: R::Device) -> Self {
        self.device = device;
        self
    }

    /// Replace the precision flag
    pub fn with_reduced_precision(mut self, reduced_precision: bool) -> Self {
        self.reduced_precision = reduced_precision;
        self
    }

    /// Device new tensors are placed on
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Whether new float tensors should be stored in reduced precision
    #[inline]
    pub fn reduced_precision(&self) -> bool {
        self.reduced_precision
    }

    /// Install this context until the returned guard is dropped
    pub fn enter(self) -> ContextGuard<R> {
        log::trace!(
            "entering {} context on {} (reduced precision: {})",
            R::name(),
            self.device.name(),
            self.reduced_precision
        );
        let token = NEXT_TOKEN.with(|next| {
            let token = next.get();
            next.set(token + 1);
            token
        });
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                token,
                runtime: TypeId::of::<R>(),
                context: Box::new(self),
            });
        });
        ContextGuard {
            token,
            _runtime: PhantomData,
            _not_send: PhantomData,
        }
    }

    /// Run `body` with this context installed
    pub fn scope<T>(self, body: impl FnOnce() -> T) -> T {
        let _guard = self.enter();
        body()
    }
}

impl<R: Runtime> Default for ExecutionContext<R> {
    fn default() -> Self {
        Self::new(R::default_device())
    }
}

/// RAII guard restoring the previous context when dropped
///
/// Guards are tied to the thread that created them. Each guard removes
/// only its own context, so dropping guards out of order leaves the
/// contexts of the guards still alive in place.
#[must_use = "the context is uninstalled as soon as the guard is dropped"]
pub struct ContextGuard<R: Runtime> {
    token: u64,
    _runtime: PhantomData<R>,
    _not_send: PhantomData<*const ()>,
}

impl<R: Runtime> Drop for ContextGuard<R> {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|entry| entry.token == self.token) {
                stack.remove(pos);
            }
        });
        log::trace!("left {} context", R::name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_default_is_full_precision_on_default_device() {
        let ctx = ExecutionContext::<CpuRuntime>::current();
        assert_eq!(ctx.device().id(), 0);
        assert!(!ctx.reduced_precision());
    }

    #[test]
    fn test_nested_scopes_restore() {
        let outer = ExecutionContext::<CpuRuntime>::new(CpuDevice::with_id(3));
        outer.scope(|| {
            assert_eq!(ExecutionContext::<CpuRuntime>::current().device().id(), 3);

            let inner = ExecutionContext::<CpuRuntime>::current().with_reduced_precision(true);
            inner.scope(|| {
                let ctx = ExecutionContext::<CpuRuntime>::current();
                assert_eq!(ctx.device().id(), 3);
                assert!(ctx.reduced_precision());
            });

            assert!(!ExecutionContext::<CpuRuntime>::current().reduced_precision());
        });
        assert_eq!(ExecutionContext::<CpuRuntime>::current().device().id(), 0);
    }

    #[test]
    fn test_guard_restores_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _guard = ExecutionContext::<CpuRuntime>::new(CpuDevice::with_id(9)).enter();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(ExecutionContext::<CpuRuntime>::current().device().id(), 0);
    }

    #[test]
    fn test_out_of_order_drop_keeps_live_context() {
        let a = ExecutionContext::<CpuRuntime>::new(CpuDevice::with_id(1)).enter();
        let b = ExecutionContext::<CpuRuntime>::new(CpuDevice::with_id(2)).enter();
        drop(a);
        assert_eq!(ExecutionContext::<CpuRuntime>::current().device().id(), 2);
        drop(b);
        assert_eq!(ExecutionContext::<CpuRuntime>::current().device().id(), 0);
    }

    #[test]
    fn test_context_is_thread_local() {
        let _guard = ExecutionContext::<CpuRuntime>::new(CpuDevice::with_id(5)).enter();
        let other = std::thread::spawn(|| ExecutionContext::<CpuRuntime>::current().device().id())
            .join()
            .unwrap();
        assert_eq!(other, 0);
        assert_eq!(ExecutionContext::<CpuRuntime>::current().device().id(), 5);
    }
}
