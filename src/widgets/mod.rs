//! User interface components reused between different parts of the
//! application.

pub mod alert;
