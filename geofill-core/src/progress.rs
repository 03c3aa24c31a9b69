/// Callback receiving one human-readable status line per event
pub type ProgressCallback = Box<dyn Fn(&str) + Send>;

/// Centralized progress reporting for a geocoding run
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    /// Report through `callback`, or to stdout when there is none
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    /// Drop every status line
    pub fn silent() -> Self {
        Self::new(Some(Box::new(|_: &str| {})))
    }

    pub fn report(&self, message: &str) {
        match self.callback {
            Some(ref cb) => cb(message),
            None => println!("{}", message),
        }
    }
}
