pub mod combine;
pub mod consts;
pub mod error;
pub mod frame;
pub mod instrument;
pub mod io;
pub mod pipeline;
pub mod reduce;
pub mod region;
pub mod stats;
