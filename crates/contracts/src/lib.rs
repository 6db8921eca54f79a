//! Contracts: templating engine, default agreement and the signing lifecycle.

pub mod contract;
pub mod template;
pub mod terms;

pub use contract::{
    ClientSignature, Contract, ContractStatus, IssueContract, SIGNING_TOKEN_LEN, SignatureData,
    generate_signing_token,
};
pub use template::render;
pub use terms::{
    ContractTerms, DEFAULT_CONTRACT_TEMPLATE, DepositTerms, RESERVED_CONDITIONS, TO_BE_CONFIRMED,
};
