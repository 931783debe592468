// Local persistence for the client.

pub mod drafts;
