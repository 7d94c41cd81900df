pub mod constants;
pub mod least_squares;
pub mod linear_solver;
pub mod signal;
pub mod simplex;
pub mod spline;
