pub mod loader;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::chain::Address;

pub use loader::{ConfigError, DEFAULT_CONFIG_PATHS, load_config};

// 托管合约的既有部署地址。仅作缺省值，一律可被配置覆盖。
static MAINNET_PAYMENT_CONTRACT: Lazy<Address> = Lazy::new(|| {
    "0x9bc5418ceded51db08467fc4b62f32c5d9ebda55"
        .parse()
        .expect("mainnet payment contract address")
});
static MAINNET_DEPOSIT_CONTRACT: Lazy<Address> = Lazy::new(|| {
    "0xfef736cfa3b884669a4e0efd6a081250cce228e7"
        .parse()
        .expect("mainnet deposit contract address")
});
static TESTNET_PAYMENT_CONTRACT: Lazy<Address> = Lazy::new(|| {
    "0xe1d4236c5774d35dc47dcc2e5e0ccfc463a3289c"
        .parse()
        .expect("testnet payment contract address")
});
static TESTNET_DEPOSIT_CONTRACT: Lazy<Address> = Lazy::new(|| {
    "0x2a8e4f9ae69c86e277602c6802085febc4bd5986"
        .parse()
        .expect("testnet deposit contract address")
});

pub(crate) fn default_gas_limit() -> u64 {
    300_000
}

pub(crate) fn default_gas_price_gwei() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

/// 托管引擎交给链客户端的构造参数。合约地址不再编译进代码，
/// 而是作为显式配置随客户端一起创建。
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowConfig {
    #[serde(default)]
    pub network: Network,
    /// 付款合约地址；缺省取所选网络的既有部署。
    #[serde(default)]
    pub payment_contract: Option<Address>,
    /// 保证金合约地址；缺省取所选网络的既有部署。
    #[serde(default)]
    pub deposit_contract: Option<Address>,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_gas_price_gwei")]
    pub gas_price_gwei: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self::for_network(Network::Mainnet)
    }
}

impl EscrowConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            payment_contract: None,
            deposit_contract: None,
            gas_limit: default_gas_limit(),
            gas_price_gwei: default_gas_price_gwei(),
        }
    }

    pub fn payment_contract(&self) -> Address {
        self.payment_contract.unwrap_or_else(|| match self.network {
            Network::Mainnet => *MAINNET_PAYMENT_CONTRACT,
            Network::Testnet => *TESTNET_PAYMENT_CONTRACT,
        })
    }

    pub fn deposit_contract(&self) -> Address {
        self.deposit_contract.unwrap_or_else(|| match self.network {
            Network::Mainnet => *MAINNET_DEPOSIT_CONTRACT,
            Network::Testnet => *TESTNET_DEPOSIT_CONTRACT,
        })
    }
}
