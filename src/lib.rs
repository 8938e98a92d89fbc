#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

#[path = "../transform/mod.rs"]
pub mod transform;

#[path = "../multitaper/mod.rs"]
pub mod multitaper;

pub use multitaper::{
    CapTapers, ConfigError, CovarianceMode, MinimumVarianceSolution, MultitaperConfig,
    MultitaperError, MultitaperSpectrum, SolverOptions, SolverOutputs, TaperBank,
    combine_estimates, multitaper_cross_spectrum, multitaper_spectrum, optimal_taper_weights,
    spherical_cap_tapers, taper_covariance, variance_sweep,
};
pub use transform::{
    CondonShortley, HarmonicConvention, Normalization, PerThreadQuadrature, QuadratureCache,
    ShCoeffs, TransformError,
};
