//! Operator CLI for the ACL layer
//!
//! Runs the same operations services use, against the configured engine and
//! Redis, so operators can inspect and repair permissions by hand. Caches are
//! invalidated and subjects pinned exactly as a service write would.
//!
//! # Example Usage
//!
//! ```bash
//! aclctl --user alice check pipeline:p1 reader
//! aclctl --user admin grant pipeline:p1 user:bob writer
//! aclctl --user admin revoke pipeline:p1 user:bob
//! aclctl --user admin publish pipeline:p1
//! aclctl owner set pipeline:p1 users alice
//! aclctl --user alice list pipeline reader
//! aclctl purge pipeline:p1 --yes
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

use anyhow::{bail, Context, Result};
use auth_acl::{AclClient, ObjectRef, RequestContext};
use clap::{Args, Parser, Subcommand};
use colored::*;

/// Inspect and edit ACL tuples
#[derive(Parser, Debug)]
#[command(name = "aclctl")]
#[command(about = "Inspect and edit relationship-based permissions")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ACL_CONFIG", default_value = "acl.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub identity: Identity,

    #[command(subcommand)]
    pub command: Command,
}

/// Who the command acts as
#[derive(Args, Debug, Default)]
pub struct Identity {
    /// Act as this user
    #[arg(long, global = true, conflicts_with = "visitor")]
    pub user: Option<String>,

    /// Act as this anonymous visitor
    #[arg(long, global = true)]
    pub visitor: Option<String>,

    /// Organization the user acts on behalf of
    #[arg(long, global = true)]
    pub requester: Option<String>,

    /// Shareable-link code presented with the request
    #[arg(long, global = true)]
    pub share_code: Option<String>,
}

impl Identity {
    pub fn context(&self) -> RequestContext {
        let mut ctx = match (self.user.as_deref(), self.visitor.as_deref()) {
            (Some(user), _) => RequestContext::user(user),
            (None, Some(visitor)) => RequestContext::visitor(visitor),
            (None, None) => RequestContext::anonymous(),
        };
        if let Some(ref requester) = self.requester {
            ctx = ctx.with_requester(requester);
        }
        if let Some(ref code) = self.share_code {
            ctx = ctx.with_share_code(code);
        }
        ctx
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a relation for the acting identity, or for --subject
    Check {
        /// Object as type:id
        object: String,
        relation: String,
        /// Subject token to check instead of the acting identity
        #[arg(long)]
        subject: Option<String>,
    },
    /// Check whether every user may execute an object
    Public {
        object: String,
    },
    /// Check the --share-code link against an object
    Link {
        object: String,
        relation: String,
    },
    /// Check a share token against an object
    Share {
        object: String,
        relation: String,
        token: String,
    },
    /// Check that --user may act on behalf of --requester
    Requester,
    /// Grant a relation to a subject token (type:id, type:*, type:id#relation)
    Grant {
        object: String,
        subject: String,
        relation: String,
    },
    /// Revoke one relation, or every standard role when none is given
    Revoke {
        object: String,
        subject: String,
        #[arg(long)]
        relation: Option<String>,
    },
    /// Make an object readable by everyone and executable by every user
    Publish {
        object: String,
    },
    /// Remove public access from an object
    Unpublish {
        object: String,
    },
    /// Read or assign the owner of an object
    Owner {
        #[command(subcommand)]
        action: OwnerAction,
    },
    /// Delete every tuple that references an object
    Purge {
        object: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// List object ids of a type on which the identity holds a relation
    List {
        object_type: String,
        relation: String,
        /// List objects granted to every user instead
        #[arg(long)]
        public: bool,
        /// Print JSON instead of one id per line
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum OwnerAction {
    Get {
        object: String,
    },
    Set {
        object: String,
        owner_type: String,
        owner_id: String,
    },
}

fn parse_object(raw: &str) -> Result<ObjectRef> {
    ObjectRef::parse(raw).with_context(|| format!("invalid object '{}'", raw))
}

fn print_decision(what: &str, allowed: bool) {
    if allowed {
        println!("{} {}", "allowed".bright_green(), what);
    } else {
        println!("{} {}", "denied".bright_red(), what);
    }
}

/// Execute one command against a connected client
pub async fn run(acl: &AclClient, identity: &Identity, command: Command) -> Result<()> {
    let ctx = identity.context();

    match command {
        Command::Check { object, relation, subject } => {
            let obj = parse_object(&object)?;
            let allowed = match subject {
                Some(ref token) => {
                    acl.check_permission_for(token, &obj.object_type, &obj.object_id, &relation)
                        .await?
                }
                None => {
                    acl.check_permission(&ctx, &obj.object_type, &obj.object_id, &relation)
                        .await?
                }
            };
            print_decision(&format!("{} on {}", relation, object), allowed);
        }
        Command::Public { object } => {
            let obj = parse_object(&object)?;
            let allowed = acl.check_public_executable(&obj.object_type, &obj.object_id).await?;
            print_decision(&format!("public execute on {}", object), allowed);
        }
        Command::Link { object, relation } => {
            let obj = parse_object(&object)?;
            if ctx.share_code.is_none() {
                bail!("--share-code is required for link checks");
            }
            let allowed = acl
                .check_link_permission(&ctx, &obj.object_type, &obj.object_id, &relation)
                .await?;
            print_decision(&format!("{} on {} via link", relation, object), allowed);
        }
        Command::Share { object, relation, token } => {
            let obj = parse_object(&object)?;
            let allowed = acl
                .check_share_link_permission(
                    &ctx,
                    &obj.object_type,
                    &obj.object_id,
                    &relation,
                    Some(&token),
                )
                .await?;
            print_decision(&format!("{} on {} via share token", relation, object), allowed);
        }
        Command::Requester => {
            acl.check_requester_permission(&ctx).await?;
            println!("{} requester check passed", "ok".bright_green());
        }
        Command::Grant { object, subject, relation } => {
            let obj = parse_object(&object)?;
            acl.set_resource_permission(
                &ctx,
                &obj.object_type,
                &obj.object_id,
                &subject,
                &relation,
                true,
            )
            .await?;
            println!("{} {} {} {}", "granted".bright_green(), subject, relation, object);
        }
        Command::Revoke { object, subject, relation } => {
            let obj = parse_object(&object)?;
            match relation {
                Some(ref relation) => {
                    acl.set_resource_permission(
                        &ctx,
                        &obj.object_type,
                        &obj.object_id,
                        &subject,
                        relation,
                        false,
                    )
                    .await?;
                    println!("{} {} {} {}", "revoked".bright_yellow(), subject, relation, object);
                }
                None => {
                    acl.delete_resource_permission(&ctx, &obj.object_type, &obj.object_id, &subject)
                        .await?;
                    println!(
                        "{} all roles of {} on {}",
                        "revoked".bright_yellow(),
                        subject,
                        object
                    );
                }
            }
        }
        Command::Publish { object } => {
            let obj = parse_object(&object)?;
            acl.set_public_permission(&ctx, &obj.object_type, &obj.object_id).await?;
            println!("{} {}", "published".bright_green(), object);
        }
        Command::Unpublish { object } => {
            let obj = parse_object(&object)?;
            acl.delete_public_permission(&ctx, &obj.object_type, &obj.object_id).await?;
            println!("{} {}", "unpublished".bright_yellow(), object);
        }
        Command::Owner { action: OwnerAction::Get { object } } => {
            let obj = parse_object(&object)?;
            let owner = acl.get_owner(&ctx, &obj.object_type, &obj.object_id).await?;
            println!("{}:{}", owner.owner_type, owner.owner_id);
        }
        Command::Owner { action: OwnerAction::Set { object, owner_type, owner_id } } => {
            let obj = parse_object(&object)?;
            acl.set_owner(&ctx, &obj.object_type, &obj.object_id, &owner_type, &owner_id)
                .await?;
            println!("{} {} owns {}", "ok".bright_green(), owner_id, object);
        }
        Command::Purge { object, yes } => {
            let obj = parse_object(&object)?;
            if !yes {
                bail!("refusing to purge {} without --yes", object);
            }
            acl.purge(&ctx, &obj.object_type, &obj.object_id).await?;
            println!("{} {}", "purged".bright_red(), object);
        }
        Command::List { object_type, relation, public, json } => {
            let ids = acl.list_permissions(&ctx, &object_type, &relation, public).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
            } else {
                for id in ids {
                    println!("{}", id);
                }
            }
        }
    }

    Ok(())
}
