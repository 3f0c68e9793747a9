pub mod control;
pub mod packet_hook;
