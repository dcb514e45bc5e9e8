pub mod account_types;
pub mod address;
pub mod lcd;
pub mod messages;
pub mod networks;
pub mod staking;
pub mod terraswap;
pub mod types;
pub mod wallet;

pub use account_types::AccountInfo;
pub use lcd::{ChainClient, ClientConfig, CreateTxOptions, LcdClient, LcdError};
pub use networks::{default_network, ChainOptions, ChainRegistry, NetworkName};
pub use types::{BroadcastResult, Coin, Coins, Msg, SignedTx, TxInfo, UnsignedTx};
pub use wallet::{KeyError, KeyProvider, TerraWallet, TransactionSigner, User};
