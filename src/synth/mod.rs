// Purpose: Voice management, derived-table caches and polyphony
// This layer sits above the dsp primitives and is what a host drives

pub mod allocator;
pub mod cache;
pub mod engine;
pub mod message;
pub mod params;
pub mod voice;
