pub mod plane;
pub mod pose;
pub mod ray;
