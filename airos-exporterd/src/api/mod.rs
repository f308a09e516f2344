pub mod exposition;
pub mod routes;
