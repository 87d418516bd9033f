// Stable machine-readable codes, one per error kind.

pub mod input {
    pub const BAD_INPUT: &str = "IP_1001";
    pub const NOT_SUPPORTED: &str = "IP_1002";
}

pub mod io {
    pub const FILE_IO: &str = "IP_2001";
}

pub mod network {
    pub const NETWORK: &str = "IP_3001";
    pub const TRANSIENT_NETWORK: &str = "IP_3002";
    pub const POLICY_SYNC: &str = "IP_3003";
}

pub mod authorization {
    pub const ACCESS_DENIED: &str = "IP_4001";
    pub const CONSENT_DENIED: &str = "IP_4002";
    pub const PRIVILEGED_REQUIRED: &str = "IP_4003";
    pub const JUSTIFICATION_REQUIRED: &str = "IP_4004";
}

pub mod system {
    pub const INTERNAL: &str = "IP_5001";
}
