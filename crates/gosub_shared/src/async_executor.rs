use crate::types::{Error, Result};
use std::future::Future;
use std::thread;

/// Runs the given future to completion on a dedicated, named worker thread. The caller is not
/// blocked; completion has to be signalled by the future itself.
pub fn spawn<F>(name: &str, f: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    //TODO: this should be done with a thread pool once more than one document is parsed at a time
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            futures::executor::block_on(f);
        })
        .map(|_| ())
        .map_err(|e| Error::Worker(e.to_string()).into())
}

/// Blocks the current thread until the given future resolves
pub fn block_on<F: Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}
