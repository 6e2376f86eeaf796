//! Minimal prompt-driven wallet, the end-to-end target for tally's own tests
//! and demos.
//!
//! Menus and prompts follow the reference wallet application closely enough
//! that the same command scripts drive both. The store path is the first
//! argument, else `WALLET_DB`, else `wallet.db`; the reference schema is
//! created on start. Blank input at a menu just redraws it, and end of input
//! exits cleanly from anywhere.

use std::io::Write as _;
use std::str::FromStr;

use anyhow::Context;
use chrono::Utc;
use libsql::{Builder, Connection, Value, params};
use rust_decimal::Decimal;
use tally_core::money::format_amount;
use tally_core::{BalanceEffect, CellValue, TransactionKind};
use tally_store::helpers::cell_from_value;
use tally_store::prestep::REFERENCE_WALLET_DDL;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("wallet-stub error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WALLET_DB").ok())
        .unwrap_or_else(|| "wallet.db".to_string());

    let db = Builder::new_local(&path)
        .build()
        .await
        .with_context(|| format!("failed to open store '{path}'"))?;
    let conn = db.connect()?;
    conn.execute_batch(REFERENCE_WALLET_DDL)
        .await
        .context("failed to create wallet schema")?;

    let mut wallet = Wallet {
        conn,
        console: Console::new(),
    };

    println!("==========================================");
    println!("  WALLET - Billetera Digital");
    println!("  Sistema de Gestion (stub)");
    println!("==========================================");

    wallet.main_menu().await?;
    println!("Hasta luego.");
    Ok(())
}

/// Line-oriented stdin with prompts flushed to stdout.
struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `label` and read one trimmed line. `None` at end of input.
    async fn prompt(&mut self, label: &str) -> anyhow::Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush()?;
        let line = self.lines.next_line().await?;
        Ok(line.map(|l| l.trim().to_string()))
    }
}

/// What a menu handler wants next.
enum Flow {
    Stay,
    Back,
    Closed,
}

struct Wallet {
    conn: Connection,
    console: Console,
}

struct AccountRow {
    id: String,
    saldo: Decimal,
    moneda: String,
}

macro_rules! ask {
    ($self:ident, $label:expr) => {
        match $self.console.prompt($label).await? {
            Some(value) => value,
            None => return Ok(Flow::Closed),
        }
    };
}

impl Wallet {
    async fn main_menu(&mut self) -> anyhow::Result<()> {
        loop {
            println!();
            println!("1. Gestion de Usuarios");
            println!("2. Gestion de Cuentas");
            println!("0. Salir");
            let Some(choice) = self.console.prompt("Seleccione una opcion: ").await? else {
                return Ok(());
            };
            let flow = match choice.as_str() {
                "" => Flow::Stay,
                "1" => self.users_menu().await?,
                "2" => self.accounts_menu().await?,
                "0" => return Ok(()),
                other => {
                    println!("Opcion invalida: {other}");
                    Flow::Stay
                }
            };
            if matches!(flow, Flow::Closed) {
                return Ok(());
            }
        }
    }

    async fn users_menu(&mut self) -> anyhow::Result<Flow> {
        loop {
            println!();
            println!("--- Gestion de Usuarios ---");
            println!("1. Crear usuario");
            println!("2. Listar usuarios");
            println!("0. Volver");
            let choice = ask!(self, "Seleccione una opcion: ");
            let flow = match choice.as_str() {
                "" => Flow::Stay,
                "1" => self.create_user().await?,
                "2" => self.list_users().await?,
                "0" => return Ok(Flow::Back),
                other => {
                    println!("Opcion invalida: {other}");
                    Flow::Stay
                }
            };
            if matches!(flow, Flow::Closed) {
                return Ok(flow);
            }
        }
    }

    async fn accounts_menu(&mut self) -> anyhow::Result<Flow> {
        loop {
            println!();
            println!("--- Gestion de Cuentas ---");
            println!("1. Crear cuenta");
            println!("2. Depositar");
            println!("3. Retirar");
            println!("4. Consultar saldo");
            println!("0. Volver");
            let choice = ask!(self, "Seleccione una opcion: ");
            let flow = match choice.as_str() {
                "" => Flow::Stay,
                "1" => self.open_account_for_document().await?,
                "2" => self.move_money(TransactionKind::Deposit).await?,
                "3" => self.move_money(TransactionKind::Withdrawal).await?,
                "4" => self.show_balance().await?,
                "0" => return Ok(Flow::Back),
                other => {
                    println!("Opcion invalida: {other}");
                    Flow::Stay
                }
            };
            if matches!(flow, Flow::Closed) {
                return Ok(flow);
            }
        }
    }

    async fn create_user(&mut self) -> anyhow::Result<Flow> {
        let nombre = ask!(self, "Nombre: ");
        let apellido = ask!(self, "Apellido: ");
        let email = ask!(self, "Email: ");
        println!("Tipo de documento: 1. DNI  2. PASAPORTE  3. CE");
        let tipo = ask!(self, "Seleccione: ");
        let documento = ask!(self, "Numero de documento: ");

        let tipo_documento = match tipo.as_str() {
            "1" => "DNI",
            "2" => "PASAPORTE",
            "3" => "CE",
            _ => {
                println!("Error: tipo de documento invalido");
                return Ok(Flow::Stay);
            }
        };
        if nombre.is_empty()
            || apellido.is_empty()
            || !email.contains('@')
            || documento.is_empty()
        {
            println!("Error: datos de usuario invalidos");
            return Ok(Flow::Stay);
        }
        if self.user_exists(&email, &documento).await? {
            println!("Error: ya existe un usuario con ese email o documento");
            return Ok(Flow::Stay);
        }

        let confirm = ask!(self, "Confirmar creacion? (s/n): ");
        if !confirm.eq_ignore_ascii_case("s") {
            println!("Operacion cancelada");
            return Ok(Flow::Stay);
        }

        let id = self.next_id("usr", "usuarios").await?;
        self.conn
            .execute(
                "INSERT INTO usuarios (id, nombre, apellido, email, documento, tipo_documento, activo, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
                params![
                    id.as_str(),
                    nombre.as_str(),
                    apellido.as_str(),
                    email.as_str(),
                    documento.as_str(),
                    tipo_documento,
                    timestamp()
                ],
            )
            .await?;
        println!("Usuario creado: {nombre} {apellido}");

        let open = ask!(self, "Desea crear una cuenta? (s/n): ");
        if open.eq_ignore_ascii_case("s") {
            self.open_account(&id).await?;
        }
        Ok(Flow::Stay)
    }

    async fn list_users(&mut self) -> anyhow::Result<Flow> {
        let mut rows = self
            .conn
            .query(
                "SELECT nombre, apellido, email, documento FROM usuarios ORDER BY rowid",
                (),
            )
            .await?;
        let mut count = 0usize;
        while let Some(row) = rows.next().await? {
            count += 1;
            println!(
                "{count}. {} {} <{}> doc {}",
                row.get::<String>(0)?,
                row.get::<String>(1)?,
                row.get::<String>(2)?,
                row.get::<String>(3)?
            );
        }
        if count == 0 {
            println!("No hay usuarios registrados");
        }
        // The reference app waits for ENTER after a listing.
        let _ = ask!(self, "Presione ENTER para continuar...");
        Ok(Flow::Stay)
    }

    async fn open_account_for_document(&mut self) -> anyhow::Result<Flow> {
        let documento = ask!(self, "Documento del titular: ");
        let mut rows = self
            .conn
            .query("SELECT id FROM usuarios WHERE documento = ?1", params![documento.as_str()])
            .await?;
        let Some(row) = rows.next().await? else {
            println!("Error: usuario no encontrado");
            return Ok(Flow::Stay);
        };
        let user_id = row.get::<String>(0)?;
        drop(rows);
        self.open_account(&user_id).await?;
        Ok(Flow::Stay)
    }

    async fn open_account(&self, user_id: &str) -> anyhow::Result<()> {
        let id = self.next_id("cta", "cuentas").await?;
        let numero = account_number();
        self.conn
            .execute(
                "INSERT INTO cuentas (id, numero_cuenta, saldo, moneda, activa, usuario_id, created_at) \
                 VALUES (?1, ?2, 0, 'PEN', 1, ?3, ?4)",
                params![id.as_str(), numero.as_str(), user_id, timestamp()],
            )
            .await?;
        println!("Cuenta creada: {numero}");
        Ok(())
    }

    async fn move_money(&mut self, kind: TransactionKind) -> anyhow::Result<Flow> {
        let numero = ask!(self, "Numero de cuenta: ");
        let monto = ask!(self, "Monto: ");
        let descripcion = ask!(self, "Descripcion: ");
        let confirm = ask!(self, "Confirmar operacion? (s/n): ");

        let Ok(monto) = Decimal::from_str(&monto) else {
            println!("Error: monto invalido");
            return Ok(Flow::Stay);
        };
        if monto <= Decimal::ZERO {
            println!("Error: el monto debe ser mayor que cero");
            return Ok(Flow::Stay);
        }
        if !confirm.eq_ignore_ascii_case("s") {
            println!("Operacion cancelada");
            return Ok(Flow::Stay);
        }
        let Some(account) = self.find_account(&numero).await? else {
            println!("Error: cuenta {numero} no encontrada");
            return Ok(Flow::Stay);
        };

        let nuevo = match kind.effect() {
            BalanceEffect::Debit if monto > account.saldo => {
                println!("Error: saldo insuficiente");
                return Ok(Flow::Stay);
            }
            BalanceEffect::Debit => account.saldo - monto,
            BalanceEffect::Credit => account.saldo + monto,
        };

        let id = self.next_id("trx", "transacciones").await?;
        let now = timestamp();
        let descripcion = if descripcion.is_empty() {
            Value::Null
        } else {
            Value::Text(descripcion)
        };
        let tx = self.conn.transaction().await?;
        tx.execute(
            "UPDATE cuentas SET saldo = ?1, updated_at = ?2 WHERE id = ?3",
            params![nuevo.to_string(), now.as_str(), account.id.as_str()],
        )
        .await?;
        tx.execute(
            "INSERT INTO transacciones \
             (id, tipo, monto, descripcion, saldo_anterior, saldo_nuevo, fecha_transaccion, cuenta_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?7)",
            params![
                id.as_str(),
                kind.as_tag(),
                monto.to_string(),
                descripcion,
                account.saldo.to_string(),
                nuevo.to_string(),
                now.as_str(),
                account.id.as_str()
            ],
        )
        .await?;
        tx.commit().await?;

        println!(
            "{} realizado. Nuevo saldo: {} {}",
            kind.as_tag(),
            format_amount(nuevo),
            account.moneda
        );
        Ok(Flow::Stay)
    }

    async fn show_balance(&mut self) -> anyhow::Result<Flow> {
        let numero = ask!(self, "Numero de cuenta: ");
        match self.find_account(&numero).await? {
            Some(account) => println!(
                "Saldo de la cuenta {numero}: {} {}",
                format_amount(account.saldo),
                account.moneda
            ),
            None => println!("Error: cuenta {numero} no encontrada"),
        }
        Ok(Flow::Stay)
    }

    async fn find_account(&self, numero: &str) -> anyhow::Result<Option<AccountRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, saldo, moneda FROM cuentas WHERE numero_cuenta = ?1",
                params![numero],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let saldo = cell_from_value(row.get_value(1)?);
        let saldo = saldo
            .as_decimal()
            .with_context(|| format!("account {numero} has a non-numeric balance: {saldo}"))?;
        let moneda = match cell_from_value(row.get_value(2)?) {
            CellValue::Text(moneda) => moneda,
            _ => "PEN".to_string(),
        };
        Ok(Some(AccountRow {
            id: row.get::<String>(0)?,
            saldo,
            moneda,
        }))
    }

    async fn user_exists(&self, email: &str, documento: &str) -> anyhow::Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM usuarios WHERE email = ?1 OR documento = ?2",
                params![email, documento],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// `prefix-N` past the largest rowid, so generated ids never collide
    /// with each other or with seeded `u-1` style ids.
    async fn next_id(&self, prefix: &str, table: &str) -> anyhow::Result<String> {
        let sql = format!("SELECT COALESCE(MAX(rowid), 0) + 1 FROM {table}");
        let mut rows = self.conn.query(&sql, ()).await?;
        let next = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 1,
        };
        Ok(format!("{prefix}-{next}"))
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Ten digits starting with `71`, like the reference app's account numbers.
fn account_number() -> String {
    let micros = Utc::now().timestamp_micros().rem_euclid(100_000_000);
    format!("71{micros:08}")
}
