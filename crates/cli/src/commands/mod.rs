pub mod doctor;
pub mod onboard;
pub mod plan;
pub mod serve;
