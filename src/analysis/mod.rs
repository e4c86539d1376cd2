pub mod cropping;
pub mod noise_residual;
pub mod quality_factor;
pub mod upsampling;
