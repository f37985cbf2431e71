mod ns;

pub use ns::{moments, TwoRelaxationTime};
