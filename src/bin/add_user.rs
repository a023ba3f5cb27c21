use bookmarks::*;

#[tokio::main]
async fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();

    match &args[..] {
        [_, db, name, email, password] => {
            let db = database::Db::new(db)?;
            let password_enc = crypto::hash_password(password)?;

            let user = db.insert_user(name, email, &password_enc).await?;
            println!("added user {} ({})", user.name, user.id);

            Ok(())
        },
        _ => {
            eprintln!("usage: ./add_user db name email password");
            std::process::exit(1);
        },
    }
}
