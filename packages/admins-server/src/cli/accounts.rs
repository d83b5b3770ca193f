use clap::Subcommand;
use rand::Rng;

use crate::accounts::AccountService;
use crate::storage::{AccountQuery, NewAccount, Page, RoleId};

/// Account management subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new administrator
    Create {
        /// Account name
        #[arg(short, long)]
        account: String,

        /// Phone number
        #[arg(long, default_value = "")]
        phone: String,

        /// Password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,

        /// Role to assign after creation
        #[arg(short, long)]
        role: Option<RoleId>,
    },

    /// List administrators
    List {
        /// Case-insensitive regular expression on the account name
        #[arg(short, long)]
        filter: Option<String>,

        /// Maximum number of rows (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: u64,
    },

    /// Show administrator details
    Show {
        /// Account name
        account: String,
    },

    /// Assign or clear an administrator's role
    SetRole {
        /// Account name
        #[arg(short, long)]
        account: String,

        /// Role ID; omit to clear the role
        #[arg(short, long)]
        role: Option<RoleId>,
    },

    /// Reset an administrator's password
    ResetPassword {
        /// Account name
        #[arg(short, long)]
        account: String,

        /// New password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Delete an administrator
    Delete {
        /// Account name
        #[arg(short, long)]
        account: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl AccountCommands {
    /// Execute the account command
    pub async fn execute(
        self,
        accounts: &AccountService,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            AccountCommands::Create {
                account,
                phone,
                password,
                role,
            } => {
                let password = password.unwrap_or_else(generate_secure_password);
                let id = accounts
                    .create(NewAccount::new(account.clone(), phone).with_password(password.clone()))
                    .await?;
                if role.is_some() {
                    accounts.set_role(id, role).await?;
                }

                println!("✅ Administrator created successfully!");
                println!();
                println!("   ID:       {}", id);
                println!("   Account:  {}", account);
                println!("   Password: {}", password);
                println!("   Role:     {}", describe_role(role));
                println!();
                println!("⚠️  Please securely share these credentials with the administrator.");
            }

            AccountCommands::List { filter, limit } => {
                let query = AccountQuery {
                    filter,
                    ..Default::default()
                };
                let admins = accounts.list(&query, Page::new(0, limit)).await?;

                if admins.is_empty() {
                    println!("No administrators found.");
                    return Ok(());
                }

                println!(
                    "{:<36} {:<24} {:<16} {:<36} {:<20}",
                    "ID", "Account", "Phone", "Role", "Created"
                );
                println!("{}", "-".repeat(136));

                for admin in admins {
                    println!(
                        "{:<36} {:<24} {:<16} {:<36} {:<20}",
                        admin.id,
                        truncate(&admin.account, 22),
                        truncate(&admin.phone_number, 14),
                        describe_role(admin.role_id),
                        admin.created_at.format("%Y-%m-%d %H:%M:%S"),
                    );
                }
            }

            AccountCommands::Show { account } => {
                let admin = accounts.get_by_account(&account).await?;

                println!("Administrator Details:");
                println!("  ID:       {}", admin.id);
                println!("  Account:  {}", admin.account);
                println!("  Phone:    {}", admin.phone_number);
                println!("  Role:     {}", describe_role(admin.role_id));
                println!("  Created:  {}", admin.created_at);
            }

            AccountCommands::SetRole { account, role } => {
                let admin = accounts.get_by_account(&account).await?;
                accounts.set_role(admin.id, role).await?;

                println!("✅ Role for {} set to {}.", account, describe_role(role));
            }

            AccountCommands::ResetPassword { account, password } => {
                let admin = accounts.get_by_account(&account).await?;
                let password = password.unwrap_or_else(generate_secure_password);
                accounts
                    .update(
                        admin.id,
                        NewAccount::new(admin.account.clone(), admin.phone_number.clone())
                            .with_password(password.clone()),
                    )
                    .await?;

                println!("✅ Password reset successfully!");
                println!();
                println!("   Account:      {}", admin.account);
                println!("   New Password: {}", password);
            }

            AccountCommands::Delete { account, force } => {
                let admin = accounts.get_by_account(&account).await?;

                if !force {
                    println!("Are you sure you want to delete administrator {}? (y/N)", account);
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)?;
                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Cancelled.");
                        return Ok(());
                    }
                }

                accounts.delete(admin.id).await?;
                println!("✅ Administrator {} has been deleted.", account);
            }
        }

        Ok(())
    }
}

fn describe_role(role: Option<RoleId>) -> String {
    role.map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Generate a secure random password
fn generate_secure_password() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%&*";
    let mut rng = rand::thread_rng();

    (0..16)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Truncate string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password_shape() {
        let password = generate_secure_password();
        assert_eq!(password.chars().count(), 16);
        assert_ne!(password, generate_secure_password());
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("administrator", 8), "admin...");
        assert_eq!(truncate("ééééééééé", 6), "ééé...");
    }
}
