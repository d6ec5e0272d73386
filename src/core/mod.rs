//! Core building blocks shared by the noise models.

pub mod loss_functions;
