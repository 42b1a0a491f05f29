pub mod mt5_bridge;
pub mod supabase;

pub use mt5_bridge::Mt5BridgeClient;
pub use supabase::SupabaseClient;
