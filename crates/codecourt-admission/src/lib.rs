//! Rate Limiter & Admission: the single choke-point a submission
//! passes through before it becomes a `Run`. Pure deterministic logic —
//! the daemon fetches the inputs (role, contest window, recent submission
//! count) and this crate only decides whether they clear.

mod gate;

pub use gate::{AdmissionRefusal, AdmissionVerdicts};
