/// Display-ready views derived from engine state
pub mod histogram;
