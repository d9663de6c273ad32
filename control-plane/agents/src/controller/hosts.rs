use crate::{controller::executor::Executor, error_map::HostErrorMap, errors::SvcError};
use std::future::Future;

/// Run `command` on the first of `hosts` which is reachable and succeeds.
/// The error of every host which was tried is kept and reduced into the returned error.
pub async fn on_any_host<T, F, Fut>(
    executor: &dyn Executor,
    hosts: &[String],
    mut command: F,
) -> Result<T, SvcError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, SvcError>>,
{
    let mut errors = HostErrorMap::new();
    for host in hosts {
        if let Err(error) = executor.daemon_check(host).await {
            tracing::debug!(host, %error, "Skipping unreachable host");
            errors.add(host, error);
            continue;
        }
        match command(host.clone()).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                tracing::warn!(host, %error, "Command failed on host");
                errors.add(host, error);
            }
        }
    }
    Err(errors.to_error().unwrap_or(SvcError::Internal {
        details: "No hosts to run the command on".to_string(),
    }))
}
