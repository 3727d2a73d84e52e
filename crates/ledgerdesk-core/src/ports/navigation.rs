//! Navigation port (driven/secondary port)
//!
//! The client only needs two things from the front end's router: where the
//! user currently is, and a way to send them to the login view when their
//! session cannot be recovered.

/// Port trait for front-end navigation
pub trait Navigator: Send + Sync {
    /// Returns the route the user is currently on (e.g. `"/ledgers"`)
    fn current_location(&self) -> String;

    /// Moves the user to `route`
    fn navigate(&self, route: &str);
}
