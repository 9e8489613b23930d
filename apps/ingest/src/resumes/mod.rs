// Resume record API: list, inspect, edit and remove the records the ingest pipeline writes.

pub mod handlers;
