//! Schema map: binds logical tables and columns to physical SQL identifiers.
//!
//! Defaults follow the wallet application's JPA mappings (`usuarios`,
//! `cuentas`, `transacciones`). Every identifier is validated before it is
//! quoted into a query.

use serde::{Deserialize, Serialize};

use crate::enums::LogicalTable;
use crate::errors::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchemaMap {
    #[serde(default)]
    pub users: UserColumns,
    #[serde(default)]
    pub accounts: AccountColumns,
    #[serde(default)]
    pub transactions: TransactionColumns,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UserColumns {
    pub table: String,
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub document: String,
    pub document_type: String,
    pub active: String,
    pub created_at: String,
}

impl Default for UserColumns {
    fn default() -> Self {
        Self {
            table: "usuarios".into(),
            id: "id".into(),
            given_name: "nombre".into(),
            family_name: "apellido".into(),
            email: "email".into(),
            document: "documento".into(),
            document_type: "tipo_documento".into(),
            active: "activo".into(),
            created_at: "created_at".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountColumns {
    pub table: String,
    pub id: String,
    pub number: String,
    pub balance: String,
    pub currency: String,
    pub active: String,
    pub owner: String,
    pub created_at: String,
}

impl Default for AccountColumns {
    fn default() -> Self {
        Self {
            table: "cuentas".into(),
            id: "id".into(),
            number: "numero_cuenta".into(),
            balance: "saldo".into(),
            currency: "moneda".into(),
            active: "activa".into(),
            owner: "usuario_id".into(),
            created_at: "created_at".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionColumns {
    pub table: String,
    pub id: String,
    pub kind: String,
    pub amount: String,
    pub prior_balance: String,
    pub new_balance: String,
    pub description: String,
    pub occurred_at: String,
    pub account: String,
    pub created_at: String,
}

impl Default for TransactionColumns {
    fn default() -> Self {
        Self {
            table: "transacciones".into(),
            id: "id".into(),
            kind: "tipo".into(),
            amount: "monto".into(),
            prior_balance: "saldo_anterior".into(),
            new_balance: "saldo_nuevo".into(),
            description: "descripcion".into(),
            occurred_at: "fecha_transaccion".into(),
            account: "cuenta_id".into(),
            created_at: "created_at".into(),
        }
    }
}

impl SchemaMap {
    /// Physical table name for a logical table.
    #[must_use]
    pub fn table_name(&self, table: LogicalTable) -> &str {
        match table {
            LogicalTable::Users => &self.users.table,
            LogicalTable::Accounts => &self.accounts.table,
            LogicalTable::Transactions => &self.transactions.table,
        }
    }

    /// Columns holding money amounts, rendered with two decimals in reports.
    #[must_use]
    pub fn money_columns(&self, table: LogicalTable) -> Vec<&str> {
        match table {
            LogicalTable::Users => Vec::new(),
            LogicalTable::Accounts => vec![self.accounts.balance.as_str()],
            LogicalTable::Transactions => vec![
                self.transactions.amount.as_str(),
                self.transactions.prior_balance.as_str(),
                self.transactions.new_balance.as_str(),
            ],
        }
    }

    /// Validate every identifier in the map.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentifier` naming the first offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, name) in self.identifiers() {
            validate_identifier(field, name)?;
        }
        Ok(())
    }

    fn identifiers(&self) -> [(&'static str, &str); 27] {
        let u = &self.users;
        let a = &self.accounts;
        let t = &self.transactions;
        [
            ("users.table", &u.table),
            ("users.id", &u.id),
            ("users.given_name", &u.given_name),
            ("users.family_name", &u.family_name),
            ("users.email", &u.email),
            ("users.document", &u.document),
            ("users.document_type", &u.document_type),
            ("users.active", &u.active),
            ("users.created_at", &u.created_at),
            ("accounts.table", &a.table),
            ("accounts.id", &a.id),
            ("accounts.number", &a.number),
            ("accounts.balance", &a.balance),
            ("accounts.currency", &a.currency),
            ("accounts.active", &a.active),
            ("accounts.owner", &a.owner),
            ("accounts.created_at", &a.created_at),
            ("transactions.table", &t.table),
            ("transactions.id", &t.id),
            ("transactions.kind", &t.kind),
            ("transactions.amount", &t.amount),
            ("transactions.prior_balance", &t.prior_balance),
            ("transactions.new_balance", &t.new_balance),
            ("transactions.description", &t.description),
            ("transactions.occurred_at", &t.occurred_at),
            ("transactions.account", &t.account),
            ("transactions.created_at", &t.created_at),
        ]
    }
}

/// Check that `name` is a plain identifier: `[A-Za-z_][A-Za-z0-9_]*`.
///
/// # Errors
///
/// Returns `CoreError::InvalidIdentifier` otherwise.
pub fn validate_identifier(field: &str, name: &str) -> Result<(), CoreError> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(CoreError::InvalidIdentifier {
            field: field.to_string(),
            name: name.to_string(),
        })
    }
}

/// Double-quote an identifier that already passed [`validate_identifier`].
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}
