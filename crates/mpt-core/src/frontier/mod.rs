pub mod sampler;

pub use sampler::{sample_frontier, FrontierSample, MonteCarloSettings, SampledFrontier};
