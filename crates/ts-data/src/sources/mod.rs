pub mod cosinus_source;

pub use cosinus_source::CosinusSource;
