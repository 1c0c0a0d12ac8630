mod convergence;
mod lifecycle;
mod map;
mod scenarios;
mod seq;
