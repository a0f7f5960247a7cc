pub mod benchmarker;
