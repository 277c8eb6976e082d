use crate::define_id_type;

define_id_type!(HostId, u32);
