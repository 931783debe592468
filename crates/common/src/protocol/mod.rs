// Wire protocol shared by the Folio server and its clients.

pub mod http;
pub mod routes;
