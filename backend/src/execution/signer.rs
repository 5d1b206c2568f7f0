use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use ethereum_types::{H160, U256 as EthU256};
use keccak_hash::keccak;
use rlp::RlpStream;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::env;
use std::fmt;

use crate::error::{SwapError, SwapResult};

/// Legacy (EIP-155) transaction ready to be signed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: TxHash,
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_transaction(&self, tx: &UnsignedTransaction) -> SwapResult<SignedTransaction>;
}

/// In-process secp256k1 key.
pub struct LocalSigner {
    secret: SecretKey,
    address: Address,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner").field("address", &self.address).finish()
    }
}

impl LocalSigner {
    pub fn from_hex(private_key: &str) -> SwapResult<Self> {
        let trimmed = private_key.trim();
        let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let key_bytes = hex::decode(hex_key)
            .map_err(|e| SwapError::Signing(format!("Invalid private key hex: {}", e)))?;
        let secret = SecretKey::from_slice(&key_bytes)
            .map_err(|e| SwapError::Signing(format!("Invalid private key: {}", e)))?;

        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self {
            secret,
            address: public_key_to_address(&public_key),
        })
    }

    /// Read the key from the environment variable called `var_name`.
    pub fn from_env(var_name: &str) -> SwapResult<Self> {
        let key = env::var(var_name)
            .map_err(|_| SwapError::Config(format!("environment variable {} is not set", var_name)))?;
        Self::from_hex(&key)
    }

    fn sign_sync(&self, tx: &UnsignedTransaction) -> SwapResult<SignedTransaction> {
        let signing_hash = keccak(encode_unsigned(tx));

        let secp = Secp256k1::new();
        let message = Message::from_slice(signing_hash.as_bytes())
            .map_err(|e| SwapError::Signing(format!("Invalid message: {}", e)))?;
        let signature = secp.sign_ecdsa_recoverable(&message, &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();

        let v = recovery_id.to_i32() as u64 + tx.chain_id * 2 + 35;
        let r = EthU256::from_big_endian(&compact[..32]);
        let s = EthU256::from_big_endian(&compact[32..]);

        let mut stream = RlpStream::new_list(9);
        append_fields(&mut stream, tx);
        stream.append(&v);
        stream.append(&r);
        stream.append(&s);
        let raw = stream.out().to_vec();
        let hash = keccak(&raw);

        Ok(SignedTransaction {
            raw: Bytes::from(raw),
            hash: TxHash::from_slice(hash.as_bytes()),
        })
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx: &UnsignedTransaction) -> SwapResult<SignedTransaction> {
        self.sign_sync(tx)
    }
}

fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak(&uncompressed[1..]);
    Address::from_slice(&hash.as_bytes()[12..])
}

fn to_eth_u256(value: U256) -> EthU256 {
    EthU256::from_big_endian(&value.to_be_bytes::<32>())
}

fn append_fields(stream: &mut RlpStream, tx: &UnsignedTransaction) {
    stream.append(&tx.nonce);
    stream.append(&EthU256::from(tx.gas_price));
    stream.append(&tx.gas_limit);
    stream.append(&H160::from_slice(tx.to.as_slice()));
    stream.append(&to_eth_u256(tx.value));
    stream.append(&tx.data.to_vec());
}

/// EIP-155 signing payload: the six fields followed by `chain_id, 0, 0`.
fn encode_unsigned(tx: &UnsignedTransaction) -> Vec<u8> {
    let mut stream = RlpStream::new_list(9);
    append_fields(&mut stream, tx);
    stream.append(&tx.chain_id);
    stream.append(&0u8);
    stream.append(&0u8);
    stream.out().to_vec()
}
