//! Host tests driving the kernel through a simulated port.

mod helpers;
mod integration;
