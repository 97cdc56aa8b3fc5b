use crate::RequestError;

/// Bounds on the data a service produces.
pub trait Data: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Data for T {}

/// Bounds on the argument list a service takes. `Default` is the empty list used
/// by `refresh` before any run.
pub trait Params: Clone + Default + Send + Sync + 'static {}
impl<T: Clone + Default + Send + Sync + 'static> Params for T {}

/// Snapshot of one request.
#[derive(Debug, Clone)]
pub struct FetchState<D, P> {
    pub loading: bool,
    pub params: Option<P>,
    pub data: Option<D>,
    pub error: Option<RequestError>,
}

impl<D, P> Default for FetchState<D, P> {
    fn default() -> Self {
        Self {
            loading: false,
            params: None,
            data: None,
            error: None,
        }
    }
}

impl<D, P> FetchState<D, P> {
    pub fn apply(&mut self, patch: StatePatch<D, P>) {
        if let Some(loading) = patch.loading {
            self.loading = loading;
        }
        if let Some(params) = patch.params {
            self.params = Some(params);
        }
        if let Some(data) = patch.data {
            self.data = data;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
    }
}

/// Partial state update. `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone)]
pub struct StatePatch<D, P> {
    pub loading: Option<bool>,
    pub params: Option<P>,
    pub data: Option<Option<D>>,
    pub error: Option<Option<RequestError>>,
}

impl<D, P> Default for StatePatch<D, P> {
    fn default() -> Self {
        Self {
            loading: None,
            params: None,
            data: None,
            error: None,
        }
    }
}

impl<D, P> StatePatch<D, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn params(mut self, params: P) -> Self {
        self.params = Some(params);
        self
    }

    pub fn data(mut self, data: Option<D>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn error(mut self, error: Option<RequestError>) -> Self {
        self.error = Some(error);
        self
    }

    /// Overlays `later` onto `self`; fields set in `later` win.
    pub fn merge(&mut self, later: StatePatch<D, P>) {
        if later.loading.is_some() {
            self.loading = later.loading;
        }
        if later.params.is_some() {
            self.params = later.params;
        }
        if later.data.is_some() {
            self.data = later.data;
        }
        if later.error.is_some() {
            self.error = later.error;
        }
    }
}

/// What a plugin's `on_before` asks of the engine.
#[derive(Debug, Clone)]
pub struct BeforeOutcome<D, P> {
    /// Suppress the call; the returned future never settles.
    pub stop_now: bool,
    /// Resolve right away with the patched data, skipping the service.
    pub return_now: bool,
    pub patch: StatePatch<D, P>,
}

impl<D, P> Default for BeforeOutcome<D, P> {
    fn default() -> Self {
        Self {
            stop_now: false,
            return_now: false,
            patch: StatePatch::default(),
        }
    }
}

impl<D, P> BeforeOutcome<D, P> {
    pub fn stop() -> Self {
        Self {
            stop_now: true,
            ..Self::default()
        }
    }

    pub fn patch(patch: StatePatch<D, P>) -> Self {
        Self {
            patch,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, later: BeforeOutcome<D, P>) {
        self.stop_now |= later.stop_now;
        self.return_now |= later.return_now;
        self.patch.merge(later.patch);
    }
}
