pub mod config;
pub mod credentials;
pub mod logging;
pub mod permutation;
pub mod remote;
pub mod run;
