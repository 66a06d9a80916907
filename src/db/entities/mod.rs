pub mod state_documents;
