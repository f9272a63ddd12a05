mod ingest;
mod lifecycle;
mod poll;
mod reset;
