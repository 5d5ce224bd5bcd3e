//! Observable fetch state.

use crate::fetch::error::FetchError;

/// Snapshot of a client's `{data, error, loading}` triple.
///
/// `aborted` marks a call that ended through cancellation. Cancellation
/// never populates `error`.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub error: Option<FetchError>,
    pub loading: bool,
    pub aborted: bool,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
            aborted: false,
        }
    }
}

impl<T> FetchState<T> {
    /// Whether no call is running.
    pub fn is_settled(&self) -> bool {
        !self.loading
    }

    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
        self.aborted = false;
    }

    pub(crate) fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.error = None;
        self.loading = false;
    }

    /// Previous data is kept so consumers can keep showing it.
    pub(crate) fn fail(&mut self, error: FetchError) {
        self.error = Some(error);
        self.loading = false;
    }

    pub(crate) fn abort(&mut self) {
        self.loading = false;
        self.aborted = true;
    }
}
