
mod files;
mod ingest;
