use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Poll `fut` to completion, turning a panic into its message
pub async fn catch_panic<F: Future>(fut: F) -> Result<F::Output, String> {
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Run `f`, turning a panic into its message
pub fn catch_panic_sync<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_panic() {
        assert_eq!(catch_panic(async { 7 }).await, Ok(7));

        let result: Result<u32, String> = catch_panic(async { panic!("boom {}", 1) }).await;
        assert_eq!(result, Err("boom 1".to_string()));
    }

    #[test]
    fn test_catch_panic_sync() {
        assert_eq!(catch_panic_sync(|| "ok"), Ok("ok"));
        assert_eq!(catch_panic_sync(|| -> () { panic!("static") }), Err("static".to_string()));
    }
}
