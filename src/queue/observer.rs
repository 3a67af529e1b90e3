use crate::app::FetchError;
use crate::domain::Decoded;

/// Receiver of terminal notifications. Exactly one of the two methods is
/// called per accepted request, possibly from different tasks for different
/// requests.
pub trait Observer<R>: Send + Sync {
    /// `value` has the shape of the request's content type.
    fn on_ready(&self, value: Decoded, reference: R);

    fn on_failed(&self, reference: R, error: &FetchError);
}
