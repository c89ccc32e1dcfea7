pub mod ingest_client;
