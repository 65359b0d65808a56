//! Contract payload variants.
//!
//! The `contract.parameter` of a normalized transaction is a tagged union
//! keyed by the sibling `type` string; on the wire the arm's fields are
//! emitted directly (no extra tag), so consumers reconstruct the arm from
//! `type`. Unknown types and undecodable values degrade to
//! [`ContractParameter::Unrecognized`], which carries the type name only.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContractParameter {
    AccountCreate(AccountCreateContract),
    AccountUpdate(AccountUpdateContract),
    SetAccountId(SetAccountIdContract),
    AccountPermissionUpdate(AccountPermissionUpdateContract),
    Transfer(TransferContract),
    TransferAsset(TransferAssetContract),
    DelegateResource(DelegateResourceContract),
    UnDelegateResource(UnDelegateResourceContract),
    TriggerSmartContract(TriggerSmartContract),
    FreezeBalance(FreezeBalanceContract),
    FreezeBalanceV2(FreezeBalanceV2Contract),
    UnfreezeBalance(UnfreezeBalanceContract),
    UnfreezeBalanceV2(UnfreezeBalanceV2Contract),
    WithdrawBalance(WithdrawBalanceContract),
    WithdrawExpireUnfreeze(WithdrawExpireUnfreezeContract),
    CancelAllUnfreezeV2(CancelAllUnfreezeV2Contract),
    CreateSmartContract(CreateSmartContract),
    UpdateSetting(UpdateSettingContract),
    UpdateEnergyLimit(UpdateEnergyLimitContract),
    ClearAbi(ClearAbiContract),
    VoteAsset(VoteAssetContract),
    VoteWitness(VoteWitnessContract),
    WitnessCreate(WitnessCreateContract),
    WitnessUpdate(WitnessUpdateContract),
    ProposalCreate(ProposalCreateContract),
    ProposalApprove(ProposalApproveContract),
    ProposalDelete(ProposalDeleteContract),
    ExchangeCreate(ExchangeCreateContract),
    ExchangeInject(ExchangeInjectContract),
    ExchangeWithdraw(ExchangeWithdrawContract),
    ExchangeTransaction(ExchangeTransactionContract),
    MarketSellAsset(MarketSellAssetContract),
    MarketCancelOrder(MarketCancelOrderContract),
    UpdateBrokerage(UpdateBrokerageContract),
    ShieldedTransfer(ShieldedTransferContract),
    /// Fallback for contract types without a dedicated decoder; the value
    /// is the type name only.
    Unrecognized(String),
}

impl ContractParameter {
    /// Decodes `value` into the arm selected by `contract_type`, degrading
    /// to [`ContractParameter::Unrecognized`] on unknown types or values
    /// that do not match the arm's shape.
    #[must_use]
    pub fn decode(contract_type: &str, value: serde_json::Value) -> Self {
        fn arm<T: DeserializeOwned>(
            value: serde_json::Value,
            wrap: fn(T) -> ContractParameter,
            contract_type: &str,
        ) -> ContractParameter {
            match serde_json::from_value(value) {
                Ok(decoded) => wrap(decoded),
                Err(_) => ContractParameter::Unrecognized(contract_type.to_string()),
            }
        }

        match contract_type {
            "AccountCreateContract" => arm(value, Self::AccountCreate, contract_type),
            "AccountUpdateContract" => arm(value, Self::AccountUpdate, contract_type),
            "SetAccountIdContract" => arm(value, Self::SetAccountId, contract_type),
            "AccountPermissionUpdateContract" => {
                arm(value, Self::AccountPermissionUpdate, contract_type)
            }
            "TransferContract" => arm(value, Self::Transfer, contract_type),
            "TransferAssetContract" => arm(value, Self::TransferAsset, contract_type),
            "DelegateResourceContract" => arm(value, Self::DelegateResource, contract_type),
            "UnDelegateResourceContract" => arm(value, Self::UnDelegateResource, contract_type),
            "TriggerSmartContract" => arm(value, Self::TriggerSmartContract, contract_type),
            "FreezeBalanceContract" => arm(value, Self::FreezeBalance, contract_type),
            "FreezeBalanceV2Contract" => arm(value, Self::FreezeBalanceV2, contract_type),
            "UnfreezeBalanceContract" => arm(value, Self::UnfreezeBalance, contract_type),
            "UnfreezeBalanceV2Contract" => arm(value, Self::UnfreezeBalanceV2, contract_type),
            "WithdrawBalanceContract" => arm(value, Self::WithdrawBalance, contract_type),
            "WithdrawExpireUnfreezeContract" => {
                arm(value, Self::WithdrawExpireUnfreeze, contract_type)
            }
            "CancelAllUnfreezeV2Contract" => arm(value, Self::CancelAllUnfreezeV2, contract_type),
            "CreateSmartContract" => arm(value, Self::CreateSmartContract, contract_type),
            "UpdateSettingContract" => arm(value, Self::UpdateSetting, contract_type),
            "UpdateEnergyLimitContract" => arm(value, Self::UpdateEnergyLimit, contract_type),
            "ClearABIContract" => arm(value, Self::ClearAbi, contract_type),
            "VoteAssetContract" => arm(value, Self::VoteAsset, contract_type),
            "VoteWitnessContract" => arm(value, Self::VoteWitness, contract_type),
            "WitnessCreateContract" => arm(value, Self::WitnessCreate, contract_type),
            "WitnessUpdateContract" => arm(value, Self::WitnessUpdate, contract_type),
            "ProposalCreateContract" => arm(value, Self::ProposalCreate, contract_type),
            "ProposalApproveContract" => arm(value, Self::ProposalApprove, contract_type),
            "ProposalDeleteContract" => arm(value, Self::ProposalDelete, contract_type),
            "ExchangeCreateContract" => arm(value, Self::ExchangeCreate, contract_type),
            "ExchangeInjectContract" => arm(value, Self::ExchangeInject, contract_type),
            "ExchangeWithdrawContract" => arm(value, Self::ExchangeWithdraw, contract_type),
            "ExchangeTransactionContract" => arm(value, Self::ExchangeTransaction, contract_type),
            "MarketSellAssetContract" => arm(value, Self::MarketSellAsset, contract_type),
            "MarketCancelOrderContract" => arm(value, Self::MarketCancelOrder, contract_type),
            "UpdateBrokerageContract" => arm(value, Self::UpdateBrokerage, contract_type),
            "ShieldedTransferContract" => arm(value, Self::ShieldedTransfer, contract_type),
            _ => Self::Unrecognized(contract_type.to_string()),
        }
    }
}

// Account contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountCreateContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub account_address: String,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub account_type: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdateContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub account_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetAccountIdContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub account_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountPermissionUpdateContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub owner: serde_json::Value,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub witness: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actives: Vec<serde_json::Value>,
}

// Asset contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub to_address: String,
    #[serde(default)]
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferAssetContract {
    #[serde(default)]
    pub asset_name: String,
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub to_address: String,
    #[serde(default)]
    pub amount: i64,
}

// Balance contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelegateResourceContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub receiver_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    #[serde(default)]
    pub balance: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub lock: bool,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub lock_period: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnDelegateResourceContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub receiver_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    #[serde(default)]
    pub balance: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreezeBalanceContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub frozen_balance: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub frozen_duration: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreezeBalanceV2Contract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub frozen_balance: i64,
    #[serde(default)]
    pub resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnfreezeBalanceContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnfreezeBalanceV2Contract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub unfreeze_balance: i64,
    #[serde(default)]
    pub resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawBalanceContract {
    #[serde(default)]
    pub owner_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawExpireUnfreezeContract {
    #[serde(default)]
    pub owner_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelAllUnfreezeV2Contract {
    #[serde(default)]
    pub owner_address: String,
}

// Smart contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerSmartContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub call_value: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub call_token_value: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub token_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSmartContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub new_contract: serde_json::Value,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub call_token_value: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub token_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSettingContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub consume_user_resource_percent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateEnergyLimitContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub origin_energy_limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearAbiContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub contract_address: String,
}

// Governance contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteAssetContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub support: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vote_address: Vec<String>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteWitnessContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub support: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub votes: Vec<WitnessVote>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WitnessVote {
    #[serde(default)]
    pub vote_address: String,
    #[serde(default)]
    pub vote_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WitnessCreateContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WitnessUpdateContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub update_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalCreateContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalApproveContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub proposal_id: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_add_approval: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalDeleteContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub proposal_id: i64,
}

// Exchange contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeCreateContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub first_token_id: String,
    #[serde(default)]
    pub first_token_balance: i64,
    #[serde(default)]
    pub second_token_id: String,
    #[serde(default)]
    pub second_token_balance: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeInjectContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub exchange_id: i64,
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub quant: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeWithdrawContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub exchange_id: i64,
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub quant: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTransactionContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub exchange_id: i64,
    #[serde(default)]
    pub token_id: String,
    #[serde(default)]
    pub quant: i64,
    #[serde(default)]
    pub expected: i64,
}

// Market contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSellAssetContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub sell_token_id: String,
    #[serde(default)]
    pub sell_token_quantity: i64,
    #[serde(default)]
    pub buy_token_id: String,
    #[serde(default)]
    pub buy_token_quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketCancelOrderContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub order_id: String,
}

// Other contracts

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBrokerageContract {
    #[serde(default)]
    pub owner_address: String,
    #[serde(default)]
    pub brokerage: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShieldedTransferContract {
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub from_amount: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shielded_spends: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shielded_receives: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub to_amount: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transparent_to_address: String,
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}
