use chrono::{DateTime, Utc};

/// Clock seam. All scheduling math goes through `now_utc` so tests can pin
/// the clock instead of sleeping through wall time.
pub trait ISys: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock, used outside of tests.
pub struct RealSys {}

impl ISys for RealSys {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant. Lets tests hit exact boundaries, like a
/// reminder scheduled for precisely "now".
pub struct FixedSys(pub DateTime<Utc>);

impl ISys for FixedSys {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}
